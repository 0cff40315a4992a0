//! komik-downloader：可断点续传的漫画章节下载器。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/章节号解析/最近访问记录等基础设施
//! - `download`：本地状态推导、续传规划、单章下载与放大、流程编排
//! - `network_parser`：来源站点（komiku / One Piece 彩色版）页面解析
//! - `ui`：命令行交互与只读 Web 服务

pub mod base_system;
pub mod download;
pub mod network_parser;
pub mod ui;
