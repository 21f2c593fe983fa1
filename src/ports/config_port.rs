//! Configuration access port trait.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Non-negative integer with a default. Negative values come back as
    /// `None` so callers can report them.
    fn get_usize(&self, section: &str, key: &str, default: usize) -> Option<usize> {
        usize::try_from(self.get_int(section, key, default as i64)).ok()
    }

    /// Raw comma-separated value split into trimmed tokens. Empty tokens are
    /// kept so validation can reject them.
    fn get_list(&self, section: &str, key: &str) -> Option<Vec<String>> {
        self.get_string(section, key)
            .map(|raw| raw.split(',').map(|t| t.trim().to_string()).collect())
    }
}
