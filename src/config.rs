pub const DEFAULT_TC: &str = "tc";

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Config {
    /// Program used for every traffic-control command.
    pub tc_binary: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tc_binary: DEFAULT_TC.into(),
        }
    }
}
