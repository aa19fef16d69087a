pub mod fsutils;
pub mod imgutils;
pub mod math;
pub mod ssim;
pub mod time;
pub mod workers;
