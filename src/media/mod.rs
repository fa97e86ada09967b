pub mod palette;
pub mod wav;
