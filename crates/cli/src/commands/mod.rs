mod card;
mod readers;
mod scan;

pub(crate) use card::{atr_command, select_file_command};
pub(crate) use readers::{list_command, monitor_command, request_command};
pub(crate) use scan::scan_command;
