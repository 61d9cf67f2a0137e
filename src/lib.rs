//! 急救黄金时间响应系统
//!
//! 汇总各子模块，供演示程序和外部集成使用。

pub use golden_core as core;
pub use golden_integration as integration;
pub use golden_workflow as workflow;
