//! Loopback end-to-end tests for the measurement engine.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod probing {
    mod integration;
}

#[cfg(test)]
mod download {
    mod integration;
}

#[cfg(test)]
mod pipeline {
    mod integration;
}
