// Locating the external tool binaries
//
// Common install prefixes first, then PATH via `which`, then the bare
// name as a last resort for the OS loader to find.

use std::path::Path;

pub fn discover(name: &str) -> String {
    let prefixes = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];
    for prefix in prefixes {
        let candidate = format!("{prefix}/{name}");
        if Path::new(&candidate).exists() {
            return candidate;
        }
    }

    if let Ok(output) = std::process::Command::new("which").arg(name).output() {
        if output.status.success() {
            let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path.is_empty() {
                return path;
            }
        }
    }

    name.to_string()
}
