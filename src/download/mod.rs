//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`      — 数据模型（ChapterRef / PipelineError / ChapterReport 等）
//! - `local_state` — 本地目录状态推导
//! - `plan`        — 章节排序与续传定位
//! - `source`      — 来源站点 / 下载 / 放大工具接口
//! - `fetch`       — 图片下载
//! - `normalizer`  — 外部放大工具
//! - `engine`      — 单章处理
//! - `progress`    — 进度上报与 CLI 进度条
//! - `downloader`  — 下载主流程编排

pub mod downloader;
pub mod engine;
pub mod fetch;
pub mod local_state;
pub mod models;
pub mod normalizer;
pub mod plan;
pub mod progress;
pub mod source;
