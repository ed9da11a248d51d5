
mod expand;
