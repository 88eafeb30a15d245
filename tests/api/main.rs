mod health_check;
mod helpers;
mod notifications;
mod password_reset;
