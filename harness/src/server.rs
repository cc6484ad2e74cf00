use std::path::Path;

pub struct Server(std::process::Child);

/// Flags shared by every peer of an execution.
pub struct Launch<'a> {
    pub path: &'a Path,
    pub base_port: u16,
    pub unit: u64,
    pub log_dir: &'a Path,
    pub verbose: u8,
}

impl Server {
    pub fn new(launch: &Launch, id: usize, count: usize, db: &str) -> std::io::Result<Self> {
        let mut command = std::process::Command::new(launch.path);
        if launch.verbose > 0 {
            let verbosity = "-".to_string() + &"v".repeat(launch.verbose as usize);
            command.arg(&verbosity);
        }
        command.args(&["-i", &id.to_string()])
            .args(&["-c", &count.to_string()])
            .args(&["-d", db])
            .args(&["--base-port", &launch.base_port.to_string()])
            .args(&["-u", &launch.unit.to_string()])
            .arg("--log-dir")
            .arg(launch.log_dir)
            .spawn()
            .map(Server)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.0.kill().ok();
    }
}
