//! Whole-pipeline tests against a seeded datastore.
