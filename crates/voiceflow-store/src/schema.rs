pub const SCHEMA_VERSION: u32 = 1;

pub const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA busy_timeout = 5000;
    PRAGMA foreign_keys = ON;
";

pub const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tasks (
        job_id      TEXT PRIMARY KEY,
        mode        TEXT NOT NULL,
        status      TEXT NOT NULL,
        result      TEXT,
        error       TEXT,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS queue (
        receipt      INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id       TEXT NOT NULL,
        item         TEXT NOT NULL,
        attempts     INTEGER NOT NULL DEFAULT 0,
        available_at INTEGER NOT NULL,
        leased_until INTEGER,
        created_at   TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_queue_available ON queue(available_at);

    CREATE TABLE IF NOT EXISTS cleanup_records (
        job_id     TEXT PRIMARY KEY,
        files      TEXT NOT NULL,
        expires_at INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_cleanup_expires ON cleanup_records(expires_at);
";
