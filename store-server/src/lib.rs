//! Storefront Server - 电商订单/支付生命周期服务
//!
//! # 架构概述
//!
//! 本模块是店面服务的主入口，提供以下核心功能：
//!
//! - **订单引擎** (`orders`): 结算、网关回调对账、超时过期状态机
//! - **订单库** (`store`): 嵌入式 redb 存储 + 目录服务
//! - **支付网关** (`gateway`): SSLCommerz 托管支付适配器
//! - **购物车** (`cart`): 显式购物车聚合
//! - **通知** (`notify`): 生命周期事件 → 后台通知
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! store-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── api/           # HTTP 路由和处理器
//! ├── orders/        # 订单生命周期引擎
//! ├── store/         # 订单库 (redb) 与目录服务
//! ├── gateway/       # 支付网关边界
//! ├── cart/          # 购物车聚合
//! ├── notify/        # 通知接收器
//! └── utils/         # 错误、日志、时间工具
//! ```

pub mod api;
pub mod cart;
pub mod core;
pub mod gateway;
pub mod notify;
pub mod orders;
pub mod store;
pub mod utils;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState};
pub use orders::{CallbackOutcome, CheckoutOutcome, ManagerError, OrdersManager};
pub use store::{CatalogService, OrderStore};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
   _____ __                  ____                 __
  / ___// /_____  ________  / __/________  ____  / /_
  \__ \/ __/ __ \/ ___/ _ \/ /_/ ___/ __ \/ __ \/ __/
 ___/ / /_/ /_/ / /  /  __/ __/ /  / /_/ / / / / /_
/____/\__/\____/_/   \___/_/ /_/   \____/_/ /_/\__/
    "#
    );
}
