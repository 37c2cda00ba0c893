pub mod energy;
pub mod heat_transfer;
pub mod materials;
