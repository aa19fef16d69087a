// https://www.johndcook.com/blog/standard_deviation/
pub struct Average {
    avg: f64,
    k: f64,
}

impl Average {
    pub fn new() -> Self {
        Self { avg: 0.0, k: 0.0 }
    }

    pub fn add(&mut self, value: impl Into<f64>) {
        let value = value.into();
        self.k += 1.0;
        self.avg += (value - self.avg) / self.k;
    }

    pub fn average(&self) -> f64 {
        self.avg
    }

    pub fn count(&self) -> f64 {
        self.k
    }
}

impl Default for Average {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Into<f64>> Extend<A> for Average {
    fn extend<T: IntoIterator<Item = A>>(&mut self, iter: T) {
        iter.into_iter().for_each(|a| self.add(a))
    }
}

/// Running (co)variances of pairs of values, Welford style.
// https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Covariance
pub struct Covariance {
    x: Average,
    y: Average,
    m2_x: f64,
    m2_y: f64,
    c_xy: f64,
}

impl Covariance {
    pub fn new() -> Self {
        Self {
            x: Average::new(),
            y: Average::new(),
            m2_x: 0.0,
            m2_y: 0.0,
            c_xy: 0.0,
        }
    }

    pub fn add(&mut self, x: impl Into<f64>, y: impl Into<f64>) {
        let x = x.into();
        let y = y.into();
        let dx = x - self.x.average();
        let dy = y - self.y.average();
        self.x.add(x);
        self.y.add(y);
        self.m2_x += dx * (x - self.x.average());
        self.m2_y += dy * (y - self.y.average());
        self.c_xy += dx * (y - self.y.average());
    }

    pub fn mean_x(&self) -> f64 {
        self.x.average()
    }

    pub fn mean_y(&self) -> f64 {
        self.y.average()
    }

    fn sample_norm(&self) -> f64 {
        let k = self.x.count();
        if k <= 1.0 {
            return 0.0;
        }
        1.0 / (k - 1.0)
    }

    pub fn variance_x(&self) -> f64 {
        self.m2_x * self.sample_norm()
    }

    pub fn variance_y(&self) -> f64 {
        self.m2_y * self.sample_norm()
    }

    pub fn covariance(&self) -> f64 {
        self.c_xy * self.sample_norm()
    }
}

impl Default for Covariance {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Into<f64>, B: Into<f64>> Extend<(A, B)> for Covariance {
    fn extend<T: IntoIterator<Item = (A, B)>>(&mut self, iter: T) {
        iter.into_iter().for_each(|(a, b)| self.add(a, b))
    }
}
