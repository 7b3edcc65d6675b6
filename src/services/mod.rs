pub mod credential;
pub mod device_info;
pub mod firmware;
pub mod reset;
pub mod update;
pub mod wlan;
