mod endpoint;
mod error;
mod retry;

#[cfg(target_os = "linux")]
mod reactor;
