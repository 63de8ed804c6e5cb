//! CRM integration — logs approved outreach against HubSpot contacts.

pub mod hubspot;

pub use hubspot::{CrmSink, HubSpotClient, HubSpotConfig};
