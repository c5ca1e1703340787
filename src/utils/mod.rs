pub mod broadcast;
pub mod filesystem;
pub mod icons;
pub mod timeout;
