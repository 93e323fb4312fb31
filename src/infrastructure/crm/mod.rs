mod http_crm_client;

pub use http_crm_client::HttpCrmClient;
