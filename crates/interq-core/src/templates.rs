//! Header-only CSV templates for each brand
//!
//! The brand is detected from the first column's prefix, so every template
//! starts with a prefixed column.

use crate::error::{Error, Result};
use crate::models::Brand;

const VISA_COLUMNS: &[&str] = &[
    "visa_arn",
    "visa_auth_date",
    "visa_presentment_date",
    "visa_issuer_bin",
    "visa_merchant_category_code",
    "visa_merchant_country_code",
    "visa_card_acceptor_id_code",
    "visa_transaction_amount",
    "visa_transaction_currency_code",
    "visa_channel_type",
    "visa_pos_entry_mode",
    "visa_eci_indicator",
    "visa_eci_3ds_auth",
    "visa_cvv2_result_code",
    "visa_avs_result_code",
    "visa_cross_border_indicator",
    "visa_terminal_capability_code",
    "visa_product_code",
    "visa_retrieval_reference_number",
];

const MASTERCARD_COLUMNS: &[&str] = &[
    "mc_mti",
    "mc_processing_code",
    "mc_acquirer_bin",
    "mc_issuer_bin",
    "mc_merchant_category_code",
    "mc_merchant_country_code",
    "mc_card_acceptor_id_code",
    "mc_card_acceptor_name_location",
    "mc_transaction_currency_code",
    "mc_settlement_currency_code",
    "mc_transaction_amount",
    "mc_settlement_amount",
    "mc_exchange_rate",
    "mc_presentment_date",
    "mc_pos_entry_mode",
    "mc_eci_indicator",
    "mc_ucaf_collection_indicator",
    "mc_cvv2_result_code",
    "mc_avs_result_code",
    "mc_cross_border_indicator",
    "mc_retrieval_reference_number",
    "mc_auth_id_response",
    "interchange_fee",
    "rate_pct",
    "fixed_fee",
    "downgraded",
    "channel_type",
    "eci_3ds_auth",
];

/// Column names of a brand's upload format, in file order
pub fn columns(brand: Brand) -> &'static [&'static str] {
    match brand {
        Brand::Visa => VISA_COLUMNS,
        Brand::Mastercard => MASTERCARD_COLUMNS,
    }
}

/// CSV bytes holding just the header row
pub fn template(brand: Brand) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns(brand))?;
    writer
        .into_inner()
        .map_err(|e| Error::InvalidData(format!("Failed to finish CSV template: {}", e)))
}

/// Download name for a brand's template
pub fn template_file_name(brand: Brand) -> String {
    format!("{}_template.csv", brand.as_str())
}
