mod attendance_test;
mod health_test;
mod settings_test;
