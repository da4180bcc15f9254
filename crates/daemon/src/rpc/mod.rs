pub mod http;
pub mod methods;
#[cfg(unix)]
pub mod unix;
