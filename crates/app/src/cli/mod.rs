pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Cat, Cp, Export, Init, Ls, Put, Rm, Search, Version, Whoami};
