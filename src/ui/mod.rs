//! 交互层入口。
//!
//! 命令行交互（noui）与只读 Web 服务（web）。

pub mod noui;
pub mod web;
