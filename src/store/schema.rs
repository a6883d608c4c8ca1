pub const SCHEMA: &str = r#"
-- Amandus accounts
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    user_role TEXT NOT NULL DEFAULT 'non-admin' CHECK (user_role IN ('admin', 'non-admin')),
    email TEXT,
    password TEXT NOT NULL,          -- argon2id hash with embedded salt
    created_on TEXT NOT NULL DEFAULT (datetime('now')),
    last_login TEXT
);

-- Supported git hosting services (reference data)
CREATE TABLE IF NOT EXISTS services (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- A user's linked account on a service, at most one per (user, service)
CREATE TABLE IF NOT EXISTS service_users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    services_id INTEGER NOT NULL REFERENCES services(id) ON DELETE CASCADE,
    username TEXT,
    email TEXT,
    reposurl TEXT,

    UNIQUE(services_id, user_id)
);

-- Repositories cloned through a linked account
CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    service_user_id INTEGER NOT NULL REFERENCES service_users(id) ON DELETE CASCADE,
    web_url TEXT NOT NULL,

    UNIQUE(service_user_id, web_url)
);

INSERT OR IGNORE INTO services (name) VALUES ('github'), ('bitbucket'), ('gitlab');

CREATE INDEX IF NOT EXISTS idx_service_users_user ON service_users(user_id);
CREATE INDEX IF NOT EXISTS idx_repositories_service_user ON repositories(service_user_id);
"#;
