use uuid::Uuid;

use crate::angle::Point;

/// Cargo or debris drifting in space, collectible by ships.
#[derive(Debug, Clone, PartialEq)]
pub struct Flotsam {
    pub uuid: Uuid,
    pub position: Point,
    pub velocity: Point,
    pub commodity: String,
    pub count: u32,
}

impl Flotsam {
    pub fn new(position: Point, commodity: impl Into<String>, count: u32) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            position,
            velocity: Point::ZERO,
            commodity: commodity.into(),
            count,
        }
    }

    pub fn step(&mut self) {
        self.position += self.velocity;
        // Flotsam coasts with light drag so it eventually settles.
        self.velocity *= 0.999;
    }
}

/// A transient visual effect (explosion, sparks). Pure value type.
#[derive(Debug, Clone, PartialEq)]
pub struct Visual {
    pub effect: String,
    pub position: Point,
    pub velocity: Point,
    pub lifetime: u32,
}

impl Visual {
    pub fn new(effect: impl Into<String>, position: Point, lifetime: u32) -> Self {
        Self {
            effect: effect.into(),
            position,
            velocity: Point::ZERO,
            lifetime,
        }
    }

    pub fn step(&mut self) {
        self.position += self.velocity;
        self.lifetime = self.lifetime.saturating_sub(1);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Asteroid {
    pub uuid: Uuid,
    pub position: Point,
    pub velocity: Point,
    pub radius: f64,
}

/// The asteroid belt of a region, if it has one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AsteroidField {
    pub asteroids: Vec<Asteroid>,
}

impl AsteroidField {
    pub fn add(&mut self, position: Point, velocity: Point, radius: f64) -> Uuid {
        let uuid = Uuid::new_v4();
        self.asteroids.push(Asteroid {
            uuid,
            position,
            velocity,
            radius,
        });
        uuid
    }

    pub fn step(&mut self) {
        for asteroid in &mut self.asteroids {
            asteroid.position += asteroid.velocity;
        }
    }

    pub fn len(&self) -> usize {
        self.asteroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asteroids.is_empty()
    }
}
