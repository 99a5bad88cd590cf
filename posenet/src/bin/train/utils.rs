pub mod device;
pub mod loss;
