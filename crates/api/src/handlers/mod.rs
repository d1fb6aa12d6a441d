pub mod dispatch;
pub mod notification;
pub mod scan;
