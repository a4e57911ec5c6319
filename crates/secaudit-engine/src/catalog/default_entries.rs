//! Built-in catalog entries for common development tooling
//!
//! Each entry lists Windows, macOS and Linux install locations; a trailing
//! separator marks a folder candidate.

use super::{Category, WhitelistEntry};

/// Built-in entries in report order
pub fn get_default_entries() -> Vec<WhitelistEntry> {
    vec![
        // ========================================================================
        // Runtimes
        // ========================================================================
        WhitelistEntry::new(
            "python",
            "Python Runtime",
            Category::Runtime,
            "Core runtime for scripts, tooling and local servers",
        )
        .with_paths(&[
            "C:\\Python312\\python.exe",
            "C:\\Python312\\pythonw.exe",
            "C:\\Python312\\Scripts\\",
            "/usr/bin/python3",
            "/usr/local/bin/python3",
            "/opt/homebrew/bin/python3",
        ])
        .with_process("python"),
        WhitelistEntry::new(
            "nodejs",
            "Node.js",
            Category::Runtime,
            "Frontend development and JavaScript tooling",
        )
        .with_paths(&[
            "C:\\Program Files\\nodejs\\node.exe",
            "C:\\Program Files\\nodejs\\npm.cmd",
            "/usr/bin/node",
            "/usr/local/bin/node",
            "/opt/homebrew/bin/node",
        ])
        .with_process("node"),
        // ========================================================================
        // Servers
        // ========================================================================
        WhitelistEntry::new(
            "uvicorn",
            "Uvicorn ASGI Server",
            Category::Server,
            "Local ASGI backend server",
        )
        .with_paths(&[
            "C:\\Python312\\Scripts\\uvicorn.exe",
            "/usr/local/bin/uvicorn",
            "/usr/bin/uvicorn",
        ])
        .with_ports(&[8000, 8001, 8080]),
        WhitelistEntry::new(
            "frontend_dev_server",
            "Frontend Dev Server",
            Category::Project,
            "Hot-reload servers for frontend projects (Vite, Next.js)",
        )
        .with_ports(&[3000, 5173]),
        // ========================================================================
        // Tools
        // ========================================================================
        WhitelistEntry::new(
            "git",
            "Git Version Control",
            Category::Tools,
            "Version control for all projects",
        )
        .with_paths(&["C:\\Program Files\\Git\\", "/usr/bin/git", "/opt/homebrew/bin/git"])
        .with_process("git"),
        WhitelistEntry::new(
            "rust_toolchain",
            "Rust Toolchain",
            Category::Tools,
            "Compiler and build outputs are scanned heavily during builds",
        )
        .with_paths(&["C:\\Users\\Public\\.cargo\\bin\\", "/usr/local/cargo/bin/"])
        .with_process("cargo"),
        // ========================================================================
        // Editors
        // ========================================================================
        WhitelistEntry::new(
            "vscode",
            "Visual Studio Code",
            Category::Ide,
            "Primary development editor",
        )
        .with_paths(&[
            "C:\\Program Files\\Microsoft VS Code\\",
            "/usr/share/code/",
            "/Applications/Visual Studio Code.app/",
        ])
        .with_process("code"),
        WhitelistEntry::new("cursor", "Cursor IDE", Category::Ide, "AI-assisted development editor")
            .with_paths(&[
                "C:\\Program Files\\cursor\\",
                "/usr/share/cursor/",
                "/Applications/Cursor.app/",
            ])
            .with_process("cursor"),
        // ========================================================================
        // Network
        // ========================================================================
        WhitelistEntry::new(
            "tailscale",
            "Tailscale VPN",
            Category::Network,
            "VPN for remote network access",
        )
        .with_paths(&[
            "C:\\Program Files\\Tailscale\\",
            "/usr/sbin/tailscaled",
            "/Applications/Tailscale.app/",
        ])
        .with_ports(&[41641])
        .with_process("tailscaled"),
    ]
}
