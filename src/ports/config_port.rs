//! Configuration access port trait.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Comma-separated list of numbers. `None` when the key is absent,
    /// `Some(Err(raw))` when any element fails to parse.
    fn get_double_list(&self, section: &str, key: &str) -> Option<Result<Vec<f64>, String>> {
        let raw = self.get_string(section, key)?;
        let parsed: Result<Vec<f64>, _> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<f64>)
            .collect();
        Some(parsed.map_err(|_| raw))
    }
}
