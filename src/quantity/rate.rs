quantity!(KilowattHourRate, suffix: "€/kWh", precision: 3);
