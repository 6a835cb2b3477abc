pub mod provider;
pub mod session;
pub mod state;
pub mod storage;
pub mod widget;
