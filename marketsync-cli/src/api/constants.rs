//! Fixed vendor endpoints

/// ERP entity root, all entity paths are relative to this
pub const MS_ENTITY_URL: &str = "https://online.moysklad.ru/api/remap/1.2/entity";

/// Page size used for offset pagination against the ERP
pub const MS_PAGE_LIMIT: usize = 1000;

pub const WB_STATS_URL: &str = "https://suppliers-stats.wildberries.ru/api/v1/supplier";
pub const WB_AUTH_LOGIN_URL: &str =
    "https://content-suppliers.wildberries.ru/passport/api/v2/auth/login";
pub const WB_CARDS_URL: &str = "https://content-suppliers.wildberries.ru/card/list";

/// Request id the card list JSON-RPC endpoint expects
pub const WB_CARDS_RPC_ID: u64 = 16041810;

/// Statistics reports cannot reach further back than this
pub const WB_MAX_REPORT_DAYS: i64 = 90;
