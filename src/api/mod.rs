pub mod crop;
pub mod farms;
pub mod http;
pub mod session;
