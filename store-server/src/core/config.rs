//! 服务器配置

use chrono_tz::Tz;

/// 服务器配置 - 店面服务的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/storefront | 工作目录 (订单库文件) |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | BUSINESS_TZ | Asia/Dhaka | 业务时区 (订单号日期) |
/// | CURRENCY | BDT | 网关结算货币 |
/// | CALLBACK_BASE_URL | http://localhost:3000 | 网关回调地址前缀 |
/// | SSLCOMMERZ_STORE_ID | testbox | 网关商户号 |
/// | SSLCOMMERZ_STORE_PASS | qwerty | 网关商户密钥 |
/// | SSLCOMMERZ_SANDBOX | true | 是否沙箱环境 |
/// | PAYMENT_TIMEOUT_MINUTES | 30 | 在线支付窗口 (分钟) |
/// | EXPIRY_SWEEP_SECS | 300 | 到期扫描周期 (秒) |
/// | LOW_STOCK_THRESHOLD | 5 | 低库存告警阈值 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/storefront HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储订单库、日志等文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 业务时区名称 (IANA)
    pub business_timezone: String,
    /// 网关结算货币
    pub currency: String,
    /// 回调地址前缀 (success/fail/cancel/ipn 拼接在其后)
    pub callback_base_url: String,
    /// SSLCommerz 商户号
    pub sslcommerz_store_id: String,
    /// SSLCommerz 商户密钥
    pub sslcommerz_store_pass: String,
    /// 是否使用网关沙箱环境
    pub sslcommerz_sandbox: bool,
    /// 在线支付窗口 (分钟)
    pub payment_timeout_minutes: i64,
    /// 到期扫描周期 (秒)
    pub expiry_sweep_secs: u64,
    /// 低库存告警阈值
    pub low_stock_threshold: i64,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/storefront".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            business_timezone: std::env::var("BUSINESS_TZ").unwrap_or_else(|_| "Asia/Dhaka".into()),
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "BDT".into()),
            callback_base_url: std::env::var("CALLBACK_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            sslcommerz_store_id: std::env::var("SSLCOMMERZ_STORE_ID")
                .unwrap_or_else(|_| "testbox".into()),
            sslcommerz_store_pass: std::env::var("SSLCOMMERZ_STORE_PASS")
                .unwrap_or_else(|_| "qwerty".into()),
            sslcommerz_sandbox: std::env::var("SSLCOMMERZ_SANDBOX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            payment_timeout_minutes: std::env::var("PAYMENT_TIMEOUT_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            expiry_sweep_secs: std::env::var("EXPIRY_SWEEP_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            low_stock_threshold: std::env::var("LOW_STOCK_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// 支付窗口 (毫秒)
    pub fn payment_timeout_ms(&self) -> i64 {
        self.payment_timeout_minutes * 60_000
    }

    /// 业务时区；名称无法解析时退回 Asia/Dhaka
    pub fn business_tz(&self) -> Tz {
        self.business_timezone
            .parse()
            .unwrap_or(chrono_tz::Asia::Dhaka)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
