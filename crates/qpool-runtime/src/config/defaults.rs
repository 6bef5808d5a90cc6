//! Compile-time defaults, merged by build.rs from library values and the
//! optional `QP_CONFIG_RS` file.

include!(concat!(env!("OUT_DIR"), "/qp_merged_config.rs"));
