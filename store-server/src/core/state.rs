//! 服务器状态

use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

use shared::order::event::StoreEvent;

use crate::cart::CartService;
use crate::core::Config;
use crate::gateway::{PaymentGateway, SslCommerzGateway};
use crate::notify::NotificationService;
use crate::orders::OrdersManager;
use crate::store::{CatalogService, OrderStore};

/// Event broadcast channel capacity
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// 服务器状态 - 持有所有服务的单例引用
///
/// 使用 Arc 实现浅拷贝，所有权成本极低。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | manager | Arc<OrdersManager> | 订单生命周期引擎 |
/// | notifications | Arc<NotificationService> | 通知记录 |
/// | events | broadcast::Sender<StoreEvent> | 生命周期事件总线 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 订单生命周期引擎
    pub manager: Arc<OrdersManager>,
    /// 通知记录服务
    pub notifications: Arc<NotificationService>,
    /// 生命周期事件总线
    pub events: broadcast::Sender<StoreEvent>,
}

impl ServerState {
    /// 初始化所有服务
    ///
    /// 打开订单库、装配目录/购物车/网关/引擎。网关适配器按配置指向
    /// SSLCommerz 沙箱或生产环境。
    pub async fn initialize(config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let catalog = Arc::new(CatalogService::new(
            events.clone(),
            config.low_stock_threshold,
        ));
        let carts = Arc::new(CartService::new(catalog.clone()));
        let gateway: Arc<dyn PaymentGateway> = Arc::new(SslCommerzGateway::new(
            config.sslcommerz_store_id.as_str(),
            config.sslcommerz_store_pass.as_str(),
            config.sslcommerz_sandbox,
        ));

        let db_path = Path::new(&config.work_dir).join("orders.redb");
        let store = OrderStore::open(&db_path, config.payment_timeout_ms())?;
        tracing::info!(db = %db_path.display(), "Order store opened");

        let manager = Arc::new(OrdersManager::new(
            store,
            catalog,
            carts,
            gateway,
            events.clone(),
            config.business_tz(),
            config.currency.clone(),
            config.callback_base_url.clone(),
        ));

        Ok(Self {
            config: config.clone(),
            manager,
            notifications: Arc::new(NotificationService::new()),
            events,
        })
    }
}
