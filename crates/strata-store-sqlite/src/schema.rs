//! SQL schema for the Strata SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Dimension keys carry no `UNIQUE` constraint: key uniqueness is a soft
/// property, reported by validation rather than enforced.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS fact (
    visit_date_key   INTEGER NOT NULL,   -- YYYYMMDD
    referrer_channel TEXT,
    page_id          TEXT,
    views            INTEGER,
    viewer_id        TEXT,
    status_flag      TEXT,               -- opaque passthrough
    visits           INTEGER,
    duration_sum     REAL,
    duration_avg     REAL,
    comments         INTEGER,
    liked_page_id    TEXT
);

CREATE TABLE IF NOT EXISTS page_inventory (
    page_id               TEXT NOT NULL,  -- 'Unknown' is the sentinel
    website_name          TEXT,
    website_url           TEXT,
    owning_business_unit  TEXT,
    page_name             TEXT,
    full_page_url         TEXT,
    source_system_page_id TEXT,
    theme                 TEXT,
    topic                 TEXT,
    page_url              TEXT,
    exclude               TEXT,
    site_name             TEXT,
    theme_normalized      TEXT,
    topic_normalized      TEXT,
    template              TEXT,
    content_type          TEXT,
    page_language         TEXT,
    news_category         TEXT,
    target_region         TEXT,
    target_organization   TEXT,
    cnt                   INTEGER
);

CREATE TABLE IF NOT EXISTS employee_contact (
    contact_id        TEXT NOT NULL,
    business_division TEXT,
    region            TEXT,
    work_country      TEXT,
    employment_class  TEXT,
    org_level_1       TEXT,
    org_level_2       TEXT,
    org_level_3       TEXT,
    org_level_4       TEXT,
    org_level_5       TEXT,
    job_role          TEXT,
    job_family        TEXT,
    job_category      TEXT
);

-- Regenerated on every run.
CREATE TABLE IF NOT EXISTS dim_date (
    date_key         INTEGER PRIMARY KEY,
    date             TEXT    NOT NULL,
    year             INTEGER NOT NULL,
    quarter          INTEGER NOT NULL,
    quarter_name     TEXT    NOT NULL,
    year_quarter     TEXT    NOT NULL,
    month            INTEGER NOT NULL,
    month_name       TEXT    NOT NULL,
    month_short      TEXT    NOT NULL,
    year_month       TEXT    NOT NULL,
    week_number      INTEGER NOT NULL,
    year_week        TEXT    NOT NULL,
    day_of_month     INTEGER NOT NULL,
    day_of_year      INTEGER NOT NULL,
    day_of_week      INTEGER NOT NULL,  -- Monday = 1
    day_name         TEXT    NOT NULL,
    day_short        TEXT    NOT NULL,
    is_weekend       INTEGER NOT NULL,
    is_month_start   INTEGER NOT NULL,
    is_month_end     INTEGER NOT NULL,
    is_quarter_start INTEGER NOT NULL,
    is_quarter_end   INTEGER NOT NULL,
    is_year_start    INTEGER NOT NULL,
    is_year_end      INTEGER NOT NULL
);

-- Aggregates are rebuilt wholesale. unique_viewers and pages_viewed are
-- distinct counts within one row and must never be summed across rows.
CREATE TABLE IF NOT EXISTS agg_daily_page (
    date_key       INTEGER NOT NULL,
    year           INTEGER,            -- calendar columns are NULL when the
    quarter        INTEGER,            -- date is outside dim_date
    month          INTEGER,
    year_month     TEXT,
    year_week      TEXT,
    day_of_week    INTEGER,
    is_weekend     INTEGER,
    page_id        TEXT,
    page_name      TEXT,
    website_name   TEXT,
    theme          TEXT,
    topic          TEXT,
    content_type   TEXT,
    template       TEXT,
    unique_viewers INTEGER NOT NULL,
    views          INTEGER NOT NULL,
    visits         INTEGER NOT NULL,
    likes          INTEGER NOT NULL,
    comments       INTEGER NOT NULL,
    duration_sum   REAL    NOT NULL,
    row_count      INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS agg_daily_website (
    date_key       INTEGER NOT NULL,
    year           INTEGER,
    quarter        INTEGER,
    month          INTEGER,
    year_month     TEXT,
    year_week      TEXT,
    day_of_week    INTEGER,
    is_weekend     INTEGER,
    website_name   TEXT    NOT NULL,
    pages_viewed   INTEGER NOT NULL,
    unique_viewers INTEGER NOT NULL,
    views          INTEGER NOT NULL,
    visits         INTEGER NOT NULL,
    likes          INTEGER NOT NULL,
    comments       INTEGER NOT NULL,
    duration_sum   REAL    NOT NULL,
    row_count      INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS agg_daily_page_person (
    date_key          INTEGER NOT NULL,
    year              INTEGER,
    quarter           INTEGER,
    month             INTEGER,
    year_month        TEXT,
    year_week         TEXT,
    day_of_week       INTEGER,
    is_weekend        INTEGER,
    page_id           TEXT,
    business_division TEXT    NOT NULL,
    region            TEXT    NOT NULL,
    unique_viewers    INTEGER NOT NULL,
    views             INTEGER NOT NULL,
    visits            INTEGER NOT NULL,
    likes             INTEGER NOT NULL,
    comments          INTEGER NOT NULL,
    duration_sum      REAL    NOT NULL,
    row_count         INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS agg_monthly_page (
    year_month     INTEGER NOT NULL,   -- YYYYMM
    page_id        TEXT,
    page_name      TEXT,
    website_name   TEXT,
    theme          TEXT,
    topic          TEXT,
    content_type   TEXT,
    template       TEXT,
    days_in_period INTEGER NOT NULL,
    unique_viewers INTEGER NOT NULL,
    views          INTEGER NOT NULL,
    visits         INTEGER NOT NULL,
    likes          INTEGER NOT NULL,
    comments       INTEGER NOT NULL,
    duration_sum   REAL    NOT NULL,
    row_count      INTEGER NOT NULL
);

-- Whether the person grain was built on the last rebuild.
CREATE TABLE IF NOT EXISTS aggregate_meta (
    name  TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One audit row per committed ingestion run.
CREATE TABLE IF NOT EXISTS ingest_runs (
    run_id       TEXT PRIMARY KEY,
    recorded_at  TEXT NOT NULL,        -- ISO 8601 UTC
    policy       TEXT NOT NULL,        -- 'incremental' | 'full_refresh'
    fact_rows    INTEGER NOT NULL,     -- fact table size after the run
    findings     INTEGER NOT NULL,
    summary_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS fact_date_idx     ON fact(visit_date_key);
CREATE INDEX IF NOT EXISTS fact_page_idx     ON fact(page_id);
CREATE INDEX IF NOT EXISTS page_id_idx       ON page_inventory(page_id);
CREATE INDEX IF NOT EXISTS contact_id_idx    ON employee_contact(contact_id);
CREATE INDEX IF NOT EXISTS ingest_recorded_idx ON ingest_runs(recorded_at);

PRAGMA user_version = 1;
";
