/// Source name constants to ensure consistency across the codebase.
/// These strings appear in configuration, CLI filters, logs, and the
/// `data_source` output column.

// Source identifiers (used in CLI and config.toml section names)
pub const WORLD_MORTALITY: &str = "world_mortality";
pub const CDC_PROVISIONAL: &str = "cdc_provisional";
pub const ARCHIVED_NCHS: &str = "archived_nchs";
pub const LOCAL_2019: &str = "local_2019";

// Output files consumed by the downstream dashboard; the names are part of
// that contract and must not change.
pub const NATIONAL_OUTPUT_FILE: &str = "us_national_mortality_2015_present.csv";
pub const STATE_OUTPUT_FILE: &str = "state_mortality_2015_present.csv";

// Output column names, in header order
pub const COL_YEAR: &str = "year";
pub const COL_WEEK: &str = "week";
pub const COL_MMWR_WEEK: &str = "mmwr_week";
pub const COL_WEEK_ENDING_DATE: &str = "week_ending_date";
pub const COL_STATE: &str = "state";
pub const COL_DEATHS: &str = "deaths";
pub const COL_POPULATION: &str = "population";
pub const COL_RATE_PER_100K: &str = "mortality_rate_per_100k";
pub const COL_DATA_SOURCE: &str = "data_source";

pub const OUTPUT_COLUMNS: [&str; 9] = [
    COL_YEAR,
    COL_WEEK,
    COL_MMWR_WEEK,
    COL_WEEK_ENDING_DATE,
    COL_STATE,
    COL_DEATHS,
    COL_POPULATION,
    COL_RATE_PER_100K,
    COL_DATA_SOURCE,
];

/// The national aggregate row uses this canonical geography label.
pub const NATIONAL_GEOGRAPHY: &str = "United States";

/// Get all supported source identifiers, in stable priority-independent order
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![WORLD_MORTALITY, CDC_PROVISIONAL, ARCHIVED_NCHS, LOCAL_2019]
}
