pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const FILE: &str = "📄";
    pub const PACKAGE: &str = "📦";
    pub const DATABASE: &str = "🗄️";
}
