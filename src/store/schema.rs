//! Schema DDL for the Postgres backend.
//!
//! All statements are idempotent. `PgStore::ensure_schema` applies them
//! in dependency order at startup or in integration test setup.

pub const CREATE_VENUES: &str = r#"
CREATE TABLE IF NOT EXISTS venues (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    owner_id BIGINT NOT NULL,
    base_price_per_hour BIGINT NOT NULL CHECK (base_price_per_hour >= 0),
    open_hour INT NOT NULL CHECK (open_hour BETWEEN 0 AND 23),
    close_hour INT NOT NULL CHECK (close_hour BETWEEN 1 AND 24),
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    CHECK (open_hour < close_hour)
);
"#;

pub const CREATE_COURTS: &str = r#"
CREATE TABLE IF NOT EXISTS courts (
    id BIGSERIAL PRIMARY KEY,
    venue_id BIGINT NOT NULL REFERENCES venues(id),
    name TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_courts_venue ON courts(venue_id);
"#;

pub const CREATE_COURT_SPORTS: &str = r#"
CREATE TABLE IF NOT EXISTS court_sports (
    court_id BIGINT NOT NULL REFERENCES courts(id),
    sport_id BIGINT NOT NULL,
    PRIMARY KEY (court_id, sport_id)
);
"#;

pub const CREATE_PRICING_RULES: &str = r#"
CREATE TABLE IF NOT EXISTS pricing_rules (
    id BIGSERIAL PRIMARY KEY,
    venue_id BIGINT NOT NULL REFERENCES venues(id),
    name TEXT NOT NULL,
    start_hour INT NOT NULL CHECK (start_hour BETWEEN 0 AND 23),
    end_hour INT NOT NULL CHECK (end_hour BETWEEN 1 AND 24),
    days SMALLINT[] NOT NULL DEFAULT '{}',
    multiplier_bps INT NOT NULL CHECK (multiplier_bps >= 0),
    active BOOLEAN NOT NULL DEFAULT TRUE,
    CHECK (start_hour < end_hour)
);

CREATE INDEX IF NOT EXISTS idx_pricing_rules_venue ON pricing_rules(venue_id);
"#;

pub const CREATE_CANCELLATION_POLICIES: &str = r#"
CREATE TABLE IF NOT EXISTS cancellation_policies (
    venue_id BIGINT PRIMARY KEY REFERENCES venues(id),
    refund_pct INT NOT NULL CHECK (refund_pct BETWEEN 0 AND 100),
    cutoff_hours INT NOT NULL CHECK (cutoff_hours >= 0)
);
"#;

pub const CREATE_BOOKINGS: &str = r#"
CREATE TABLE IF NOT EXISTS bookings (
    id BIGSERIAL PRIMARY KEY,
    venue_id BIGINT NOT NULL REFERENCES venues(id),
    court_id BIGINT REFERENCES courts(id),
    sport_id BIGINT,
    created_by BIGINT NOT NULL,
    starts_at TIMESTAMP NOT NULL,
    ends_at TIMESTAMP NOT NULL,
    total_amount BIGINT NOT NULL CHECK (total_amount >= 0),
    points_used BIGINT NOT NULL DEFAULT 0 CHECK (points_used >= 0),
    paid_amount BIGINT NOT NULL DEFAULT 0 CHECK (paid_amount >= 0),
    status TEXT NOT NULL,
    refund_pct INT NOT NULL CHECK (refund_pct BETWEEN 0 AND 100),
    cutoff_hours INT NOT NULL CHECK (cutoff_hours >= 0),
    cancelled_at TIMESTAMP,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    CHECK (starts_at < ends_at)
);

CREATE INDEX IF NOT EXISTS idx_bookings_venue_interval
    ON bookings(venue_id, starts_at, ends_at);
CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status);
"#;

pub const CREATE_BOOKING_PARTICIPANTS: &str = r#"
CREATE TABLE IF NOT EXISTS booking_participants (
    id BIGSERIAL PRIMARY KEY,
    booking_id BIGINT NOT NULL REFERENCES bookings(id),
    user_id BIGINT,
    guest_email TEXT,
    invite_token TEXT UNIQUE,
    share_amount BIGINT NOT NULL CHECK (share_amount >= 0),
    is_initiator BOOLEAN NOT NULL DEFAULT FALSE,
    status TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    CHECK (user_id IS NOT NULL OR guest_email IS NOT NULL)
);

CREATE INDEX IF NOT EXISTS idx_participants_booking
    ON booking_participants(booking_id);
"#;

pub const CREATE_PAYMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS payments (
    id BIGSERIAL PRIMARY KEY,
    booking_id BIGINT NOT NULL REFERENCES bookings(id),
    amount BIGINT NOT NULL CHECK (amount >= 0),
    points_used BIGINT NOT NULL DEFAULT 0 CHECK (points_used >= 0),
    status TEXT NOT NULL,
    provider_ref TEXT NOT NULL UNIQUE,
    created_at TIMESTAMP NOT NULL DEFAULT NOW()
);
"#;

pub const CREATE_WALLETS: &str = r#"
CREATE TABLE IF NOT EXISTS wallets (
    user_id BIGINT PRIMARY KEY,
    balance BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);
"#;

pub const CREATE_WALLET_TRANSACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS wallet_transactions (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    booking_id BIGINT,
    amount BIGINT NOT NULL,
    balance_after BIGINT NOT NULL,
    direction TEXT NOT NULL,
    category TEXT NOT NULL,
    description TEXT,
    created_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_wallet_tx_user
    ON wallet_transactions(user_id, id DESC);
"#;

/// Everything, in dependency order.
pub const ALL: &[&str] = &[
    CREATE_VENUES,
    CREATE_COURTS,
    CREATE_COURT_SPORTS,
    CREATE_PRICING_RULES,
    CREATE_CANCELLATION_POLICIES,
    CREATE_BOOKINGS,
    CREATE_BOOKING_PARTICIPANTS,
    CREATE_PAYMENTS,
    CREATE_WALLETS,
    CREATE_WALLET_TRANSACTIONS,
];
