//! # Innate Primitives
//!
//! Hardcoded separators and limits for the modelkit CORE.
//!
//! These constants define the path grammar. They are compiled into the
//! binary and are immutable at runtime.
//!
//! ## Path Grammar
//!
//! ```text
//! group   := path ("," path)*
//! path    := segment ("." segment)*
//! segment := name ":" id
//! ```

/// Separates a parent segment from its child segment.
pub const CHILD_SEPARATOR: char = '.';

/// Separates a model name from its id inside one segment.
pub const ID_SEPARATOR: char = ':';

/// Joins alternative root paths in a multi-root query.
pub const GROUP_SEPARATOR: char = ',';

/// Wildcard id. Matches any concrete id in queries and subscriptions.
pub const ANY_ID: &str = "*";

/// Semantic field kind whose value doubles as the instance id.
pub const ID_KIND: &str = "id";

/// Prefix of auto-generated instance ids.
pub const GENERATED_ID_PREFIX: &str = "uniq";

/// Minimum time between `change` events on one model, in milliseconds.
///
/// Not enforced: all synchronous mutations in one call stack coalesce into
/// one `change` event instead.
pub const CHANGES_TIMEOUT_MS: u64 = 500;

// =============================================================================
// EVENT NAMES
// =============================================================================

/// Model-level event fired once per flushed batch of field writes.
pub const EVENT_CHANGE: &str = "change";

/// Model-level event fired after every individual field write.
pub const EVENT_FIELD_CHANGE: &str = "field-change";

/// Model-level event fired after every initializing field write.
pub const EVENT_FIELD_INIT: &str = "field-init";

/// Fired on a model right after it is registered.
pub const EVENT_CREATE: &str = "create";

/// Fired on a model when the registry destroys it.
pub const EVENT_DESTRUCT: &str = "destruct";

/// Fired after `clear`.
pub const EVENT_CLEAR: &str = "clear";

/// Fired after `update`.
pub const EVENT_UPDATE: &str = "update";

/// Fired after `fix`.
pub const EVENT_FIX: &str = "fix";

/// Fired after `rollback`.
pub const EVENT_ROLLBACK: &str = "rollback";

/// Fired by `validate` when at least one rule failed.
pub const EVENT_ERROR: &str = "error";

/// Fired by `validate` after every run.
pub const EVENT_VALIDATED: &str = "validated";
