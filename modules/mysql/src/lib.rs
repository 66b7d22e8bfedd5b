//! Loadable MariaDB/MySQL driver module.
//!
//! Build with `cargo build -p sqlport-driver-mysql` and put the resulting
//! `libsqlport_driver_mysql.so` (or platform equivalent) on the driver
//! search path. It serves the `mysql`, `mariadb`, `maria` and `my` schemes.

sqlport::export_drivers!(sqlport::drivers::mariadb::MariadbDriver);
