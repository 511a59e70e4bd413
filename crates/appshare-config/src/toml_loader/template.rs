//! Default TOML config template with inline documentation comments.

/// The config file written on first start. Every value is commented out
/// so the built-in defaults apply until the operator edits it.
pub fn default_config_toml() -> &'static str {
    r##"# appshare server configuration
# Schema version 1
# Only override what you want to change; missing fields use defaults.
#
# Environment overrides (applied after this file):
#   APPSHARE_ALLOWED_APPLICATIONS  comma-separated whitelist
#   APPSHARE_MAX_CONCURRENT_APPS   integer
#   DISPLAY                        X display for launched apps

[apps]
# allowed = ["firefox", "code", "cursor", "gedit", "libreoffice"]
# max_concurrent = 10        # 1-64
# display = ":0"
# launch_timeout_ms = 15000  # 500-120000
# stop_grace_ms = 5000       # 100-60000
# require_window = true
# working_dir = ""           # empty = $HOME

[health]
# interval_ms = 1000         # 10-60000
# failure_threshold = 3      # 1-20
# max_memory_mb = 4096       # 0 = unlimited
# max_cpu_percent = 0.0      # 0 = unlimited

[restart]
# enabled = true
# max_restarts = 3           # 0-20
# window_secs = 60           # 1-86400

[capture]
# frame_rate = 30            # 1-60
# quality = 80               # 1-100
# max_width = 1920           # 320-7680
# queue_depth = 4            # 1-256
# send_timeout_ms = 2000     # 10-30000
# max_consecutive_drops = 150
# failure_threshold = 10
# failure_window_secs = 10

[layout]
# gap = 0                    # 0-100
# outer_margin = 0           # 0-200
# cascade_step = 30          # 1-200
# cascade_scale = 0.5        # 0.2-1.0
# max_attempts = 3           # 1-10

[sessions]
# max_participants = 10      # 1-100
# allow_guests = true
# idle_timeout_secs = 3600   # 0 = never reap

[server]
# bind = "127.0.0.1"
# port = 8765                # 1024-65535
# hello_timeout_secs = 10
# max_connections = 256

[logging]
# level = "info"             # trace, debug, info, warn, error
# directives = []            # extra EnvFilter directives
"##
}
