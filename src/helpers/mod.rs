pub mod kahan;
