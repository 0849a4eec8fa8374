mod config;

pub use self::config::{
    parse_address, ChainSettings, HeadMode, NativeAssetSettings, PostgresSettings, PriceSettings,
    SchedulerSettings, Settings, TokenSettings,
};
