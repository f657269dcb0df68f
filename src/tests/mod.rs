

#[cfg(feature = "allow_filesystem")]
mod test_from_yaml;

#[cfg(feature = "allow_filesystem")]
mod test_undercarriage;
