use std::sync::Arc;

use crate::{
    config::Config, database::Database, email::Mailer, payments::GatewayClient,
};

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub gateway: GatewayClient,
    pub mailer: Mailer,
}

impl AppState {
    pub fn new() -> Arc<Self> {
        let config = Config::load();

        let db = Database::open(&config.database_path).expect("Database misconfigured!");
        let gateway = GatewayClient::new(&config.gateway_url, &config.gateway_key);
        let mailer = Mailer::new(&config.mail_url, &config.mail_key, &config.mail_from);

        Arc::new(Self {
            config,
            db,
            gateway,
            mailer,
        })
    }
}
