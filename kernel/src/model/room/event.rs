use derive_new::new;

#[derive(Debug, new)]
pub struct CreateRoom {
    pub name: String,
    pub hourly_rate: f64,
}
