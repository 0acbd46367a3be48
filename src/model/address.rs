//! Sender and recipient addresses.

/// A mailbox: optional display name plus bare address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`, may be empty when only a name is known).
    pub address: String,
}

impl EmailAddress {
    /// Build an address from already-separated parts, trimming both.
    pub fn new(display_name: impl AsRef<str>, address: impl AsRef<str>) -> Self {
        Self {
            display_name: strip_quotes(display_name.as_ref()),
            address: address.as_ref().trim().trim_matches(['<', '>']).to_string(),
        }
    }

    /// Parse a single mailbox from a header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    /// - `"Display Name"` (no address; kept as the display name)
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self::new(&trimmed[..open], &trimmed[open + 1..close]);
            }
        }

        if trimmed.contains('@') && !trimmed.contains(' ') {
            return Self::new("", trimmed);
        }

        // Exchange-style entries often carry only a name
        Self::new(trimmed, "")
    }

    /// Parse a list separated by `,` or `;`.
    ///
    /// Separators inside quotes or angle brackets are not list boundaries:
    /// `"Last, First" <a@b.com>; other@c.com` yields two entries.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' | ';' if !in_quotes && !in_angle => {
                    let addr = Self::parse(&current);
                    if !addr.is_empty() {
                        results.push(addr);
                    }
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        let addr = Self::parse(&current);
        if !addr.is_empty() {
            results.push(addr);
        }

        results
    }

    /// `true` when neither a name nor an address is known.
    pub fn is_empty(&self) -> bool {
        self.display_name.is_empty() && self.address.is_empty()
    }

    /// Identity used for de-duplication: the lower-cased address, or the
    /// lower-cased display name for name-only entries.
    pub fn key(&self) -> String {
        if self.address.is_empty() {
            self.display_name.to_lowercase()
        } else {
            self.address.to_lowercase()
        }
    }

    /// Format for display: `"Display Name <address>"`, `"address"` or `"Display Name"`.
    pub fn display(&self) -> String {
        match (self.display_name.is_empty(), self.address.is_empty()) {
            (true, _) => self.address.clone(),
            (false, true) => self.display_name.clone(),
            (false, false) => format!("{} <{}>", self.display_name, self.address),
        }
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
