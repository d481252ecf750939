//! revmark-core：文档修订批处理管线的核心
//!
//! 四层结构，自底向上：
//! 1. [`rotate`] —— 纯几何的旋转坐标换算；
//! 2. [`revision`] —— 修订历史表的定位与递增；
//! 3. [`engine`] —— 单文档的"脱敏 → 插入 → 修订更新"序列，
//!    只依赖 [`document::DocumentOps`] 能力集合；
//! 4. [`batch`] —— 多文档并行编排、进度与结果汇总。
//!
//! 配置与编辑器互通格式见 [`config`] 与 [`interchange`]。

pub mod batch;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod interchange;
pub mod job;
pub mod revision;
pub mod rotate;
pub mod types;

pub use batch::{run_batch, BatchOptions, BatchSummary};
pub use config::{ConfigError, JobConfig, RevisionConfig};
pub use document::{DocumentOps, TableGrid, TextAlign};
pub use engine::{mutate_document, run_job, EngineWarning, MutationReport};
pub use error::EngineError;
pub use job::{discover_jobs, Job, JobOutcome, JobResult};
pub use revision::{plan_revision, NewRevisionFields, RevisionOutcome, RevisionPlan};
pub use rotate::{adjust_point, adjust_rect, InvalidRotation};
pub use types::{InsertionPoint, Point, Rect, Region};
